// Engine contract — the trait surface resolved bundles are adapted into.

pub mod traits;
