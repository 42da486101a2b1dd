// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Virtual File Bridge
// ====================================================================================
//
// The `bridge` is how host data reaches engine modules and how their results come
// back. Modules only understand file names, so data travels under a virtual file
// name that the engine resolves to an in-memory container.
//
// Data Flow (Input):
//
//   1. [Builders (virtualfile_from_columns / _matrix / _grid)] -> Receive host data
//         |
//         `-> a. Calls `marshal` to turn arrays into engine-ready `Buffer`s
//         |
//         `-> b. Calls `Session::create_empty` + `put_*` to fill a `DataContainer`
//
//   2. [Scoped Acquisition (with_virtual_file)] -> Registers the container under a name
//         |
//         `-> runs the caller's body with that name, then always releases it
//
//   3. [Session::call_module] -> The module reads the name like any input file
//
//
// Data Flow (Output):
//
//   1. [for_output / with_output] -> Path unchanged, or an empty OUT virtual file
//
//   2. [Session::call_module] -> The engine populates the virtual file
//
//   3. [virtualfile_to_dataset / _raster / _image] -> Calls `decode` to copy the
//      engine-owned result into host memory before the name is released
//
// ====================================================================================
pub mod builders;
pub mod output;
pub mod virtualfile;

pub use builders::InputData;
pub use output::OutputTarget;
pub use virtualfile::VirtualFile;
