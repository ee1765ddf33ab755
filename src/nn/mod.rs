pub mod dataset;
pub mod evaluation;
pub mod model;
pub mod training;

/// Model type used for CPU inference and tests
pub type CpuModel = model::DilatedGruModel<burn::backend::NdArray>;
