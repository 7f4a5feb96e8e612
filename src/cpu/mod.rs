mod cst_reg_file;
mod float_reg_file;
mod reg_file;

pub use cst_reg_file::CstRegFile;
pub use float_reg_file::FloatRegFile;
pub use reg_file::RegFile;
