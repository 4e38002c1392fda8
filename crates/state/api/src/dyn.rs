use crate::StateView;

/// A boxed, cloneable [`StateView`], used where the concrete state is selected
/// at runtime.
pub type DynState = Box<dyn StateView>;

impl Clone for Box<dyn StateView> {
    fn clone(&self) -> Self {
        dyn_clone::clone_box(&**self)
    }
}
