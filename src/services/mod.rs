pub mod attribution;
pub mod normalizer;
pub mod reconciler;
