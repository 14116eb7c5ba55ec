pub(crate) mod gestures;
pub(crate) mod keyboard;
pub(crate) mod listener;
