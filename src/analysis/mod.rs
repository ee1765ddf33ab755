pub mod metrics;
pub mod pca;
pub mod scaling;
pub mod split;
