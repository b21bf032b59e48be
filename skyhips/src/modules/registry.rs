//! Module classes and live module instances.

use std::collections::BTreeMap;
use std::ops::ControlFlow;

use thiserror::Error;
use tracing::{debug, info};

use super::milkyway::MilkyWay;
use super::{DataSource, DrawTile, FrameContext, SkyModule};
use crate::engine::Engine;
use crate::traverse::TraverseStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    #[error("Unknown module class: {0}")]
    UnknownClass(String),

    #[error("Module class already registered: {0}")]
    DuplicateClass(&'static str),

    #[error("Module already exists: {0}")]
    DuplicateModule(String),
}

/// A module type the registry can instantiate.
#[derive(Clone, Copy)]
pub struct ModuleClass {
    pub id: &'static str,
    pub factory: fn() -> Box<dyn SkyModule>,
}

impl std::fmt::Debug for ModuleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleClass").field("id", &self.id).finish()
    }
}

fn new_milkyway() -> Box<dyn SkyModule> {
    Box::new(MilkyWay::new())
}

/// Registered classes plus the modules created from them.
#[derive(Default)]
pub struct ModuleRegistry {
    classes: Vec<ModuleClass>,
    modules: Vec<Box<dyn SkyModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in classes registered.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.classes.push(ModuleClass {
            id: MilkyWay::CLASS,
            factory: new_milkyway,
        });
        registry
    }

    pub fn register_class(&mut self, class: ModuleClass) -> Result<(), ModuleError> {
        if self.classes.iter().any(|c| c.id == class.id) {
            return Err(ModuleError::DuplicateClass(class.id));
        }
        debug!(class = class.id, "module class registered");
        self.classes.push(class);
        Ok(())
    }

    pub fn classes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.classes.iter().map(|c| c.id)
    }

    /// Instantiate a module of `class_id`. Returns its instance id.
    pub fn create(&mut self, class_id: &str) -> Result<String, ModuleError> {
        let class = self
            .classes
            .iter()
            .find(|c| c.id == class_id)
            .ok_or_else(|| ModuleError::UnknownClass(class_id.to_string()))?;
        let module = (class.factory)();
        let id = module.id().to_string();
        if self.get(&id).is_some() {
            return Err(ModuleError::DuplicateModule(id));
        }
        info!(class = class_id, id = %id, "module created");
        self.modules.push(module);
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<&dyn SkyModule> {
        self.modules.iter().find(|m| m.id() == id).map(|m| m.as_ref())
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut (dyn SkyModule + 'static)> {
        self.modules
            .iter_mut()
            .find(|m| m.id() == id)
            .map(|m| m.as_mut())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Offer a data source to each module in creation order.
    ///
    /// Returns the id of the first module that accepts it.
    pub fn add_data_source(
        &mut self,
        engine: &Engine,
        url: &str,
        kind: &str,
        args: &BTreeMap<String, String>,
    ) -> Option<String> {
        for module in self.modules.iter_mut() {
            if module.add_data_source(engine, url, kind, args) == DataSource::Accepted {
                return Some(module.id().to_string());
            }
        }
        debug!(url = %url, kind = %kind, "data source not claimed");
        None
    }

    /// Advance every module. Returns true if any changed.
    pub fn update(&mut self, dt: f64) -> bool {
        self.modules
            .iter_mut()
            .fold(false, |changed, m| m.update(dt) | changed)
    }

    /// Modules sorted by render order; ties keep creation order.
    pub fn modules_in_render_order(&self) -> Vec<&dyn SkyModule> {
        let mut modules: Vec<&dyn SkyModule> = self.modules.iter().map(|m| m.as_ref()).collect();
        modules.sort_by(|a, b| a.render_order().total_cmp(&b.render_order()));
        modules
    }

    /// Render every module in order. Stops at the first abort.
    pub fn render<F>(&self, ctx: &FrameContext<'_>, mut draw: F) -> TraverseStatus
    where
        F: FnMut(&str, DrawTile) -> ControlFlow<i32>,
    {
        let mut status = TraverseStatus::Complete;
        for module in self.modules_in_render_order() {
            let id = module.id();
            match module.render(ctx, &mut |tile: DrawTile| draw(id, tile)) {
                TraverseStatus::Aborted(code) => return TraverseStatus::Aborted(code),
                TraverseStatus::DepthLimited => status = TraverseStatus::DepthLimited,
                TraverseStatus::Complete => {}
            }
        }
        status
    }

    /// Drop every module. Class registrations stay.
    pub fn clear(&mut self) {
        self.modules.clear();
    }
}
