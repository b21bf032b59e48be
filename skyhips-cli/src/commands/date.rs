//! `date`: convert a HiPS date string to MJD.

use skyhips::survey::parse_date;

use crate::error::CliError;

pub fn run(input: &str) -> Result<(), CliError> {
    let mjd = parse_date(input);
    if mjd == 0.0 {
        return Err(CliError::InvalidArgument(format!(
            "unrecognized date '{}', expected e.g. 2019-01-02T15:27Z",
            input
        )));
    }
    println!("{:.6}", mjd);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(run("yesterday"), Err(CliError::InvalidArgument(_))));
        assert!(run("2019-01-02T15:27Z").is_ok());
    }
}
