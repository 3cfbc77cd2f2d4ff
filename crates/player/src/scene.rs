use crate::time::PositionRequest;

/// Applies snapshots to a live scene.
///
/// The engine calls `before_update`, `update_scene` and `after_update` in that
/// order, once per applied position change.
pub trait SceneReconciler<T> {
    fn before_update(&mut self) {}

    fn update_scene(&mut self, snapshot: &T, update_non_material_assets: bool);

    /// A position returned here is applied on the next tick, never within the
    /// current one.
    fn after_update(&mut self) -> Option<PositionRequest> {
        None
    }
}

/// Reconciler that discards every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReconciler;

impl<T> SceneReconciler<T> for NullReconciler {
    fn update_scene(&mut self, _snapshot: &T, _update_non_material_assets: bool) {}
}
