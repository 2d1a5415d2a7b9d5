//! Controller registry and mount orchestration.
//!
//! The registry is the startup-phase replacement for metadata attached to
//! the controllers themselves: controller identity maps to the
//! materialized router, and mounting validates that identity list before
//! touching the parent router.

use std::any::TypeId;

use axum::Router;
use dashmap::DashMap;

use crate::controller::{Controller, MountedController, materialize, short_type_name};
use crate::error::{Result, SwitchyardError};

/// Identity of a controller type, as passed to [`Registry::mount`].
#[derive(Debug, Clone, Copy)]
pub struct ControllerKey {
    id: TypeId,
    name: &'static str,
}

impl ControllerKey {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Registry mapping controller identity to its materialized router.
///
/// Populated by explicit [`register`](Registry::register) calls during
/// startup, before any request is served. Registering the same controller
/// twice replaces the previous entry, so a setup routine that runs twice
/// cannot silently duplicate routes.
#[derive(Default)]
pub struct Registry {
    controllers: DashMap<TypeId, MountedController>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materializes `C` and stores the result under its type identity.
    pub fn register<C: Controller>(&self) -> Result<()> {
        let mounted = materialize::<C>()?;
        tracing::debug!(
            controller = mounted.name(),
            entries = mounted.entries(),
            "controller registered"
        );
        self.controllers.insert(TypeId::of::<C>(), mounted);
        Ok(())
    }

    /// The materialized controller for `T`, if registered.
    pub fn mounted<T: 'static>(&self) -> Option<MountedController> {
        self.controllers
            .get(&TypeId::of::<T>())
            .map(|entry| entry.value().clone())
    }

    /// Attaches each listed controller's sub-router onto `parent`, in list
    /// order.
    ///
    /// Every key is validated first: a controller without a materialized
    /// router fails the whole mount by name, before anything is merged, so
    /// a failed call never half-mounts. Overlapping paths between
    /// controllers are left to the underlying router's own semantics.
    pub fn mount(&self, parent: Router, controllers: &[ControllerKey]) -> Result<Router> {
        let mut routers = Vec::with_capacity(controllers.len());
        for key in controllers {
            match self.controllers.get(&key.id) {
                Some(entry) => routers.push((key.name, entry.router())),
                None => {
                    return Err(SwitchyardError::UnmountableController {
                        controller: key.name,
                    });
                }
            }
        }

        let mut router = parent;
        for (name, sub) in routers {
            tracing::info!(controller = name, "mounting controller");
            router = router.merge(sub);
        }
        Ok(router)
    }
}
