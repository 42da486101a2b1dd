// In: src/ffi/abi.rs

//! Binary layouts and entry-point signatures of the engine's C API.
//!
//! Only the structures the host dereferences are laid out here: the dataset
//! hierarchy the decoder walks, and the grid/image containers with their shared
//! header. VECTOR and MATRIX containers are created and filled exclusively
//! through entry points, so they stay opaque `*mut c_void`.

use std::os::raw::{c_char, c_double, c_float, c_int, c_uint, c_void};

//==================================================================================
// I. Fixed Sizes
//==================================================================================

pub const GRID_UNIT_LEN: usize = 80;
pub const GRID_TITLE_LEN: usize = 80;
pub const GRID_COMMAND_LEN: usize = 320;
pub const GRID_REMARK_LEN: usize = 160;

/// Returned by the enum lookup for names the engine does not know.
pub const NOTSET: c_int = -99999;

/// Size of the scratch buffer handed to the default-value query.
pub const DEFAULT_VALUE_LEN: usize = 10_000;

//==================================================================================
// II. Dataset Hierarchy (Dataset -> Table -> Segment -> Column)
//==================================================================================

#[repr(C)]
#[derive(Debug)]
pub struct GmtDataSegment {
    pub n_rows: u64,
    pub n_columns: u64,
    pub min: *mut c_double,
    pub max: *mut c_double,
    /// `n_columns` pointers, each to `n_rows` doubles.
    pub data: *mut *mut c_double,
    pub label: *mut c_char,
    pub header: *mut c_char,
    /// Optional trailing text, `n_rows` string pointers.
    pub text: *mut *mut c_char,
    pub hidden: *mut c_void,
}

#[repr(C)]
#[derive(Debug)]
pub struct GmtDataTable {
    pub n_headers: c_uint,
    pub n_columns: u64,
    pub n_segments: u64,
    pub n_records: u64,
    pub min: *mut c_double,
    pub max: *mut c_double,
    pub header: *mut *mut c_char,
    pub segment: *mut *mut GmtDataSegment,
    pub hidden: *mut c_void,
}

#[repr(C)]
#[derive(Debug)]
pub struct GmtDataset {
    pub n_tables: u64,
    pub n_columns: u64,
    pub n_segments: u64,
    pub n_records: u64,
    pub min: *mut c_double,
    pub max: *mut c_double,
    pub table: *mut *mut GmtDataTable,
    pub type_: c_int,
    pub geometry: c_int,
    pub proj_ref_proj4: *mut c_char,
    pub proj_ref_wkt: *mut c_char,
    pub proj_ref_epsg: c_int,
    pub hidden: *mut c_void,
}

//==================================================================================
// III. Grid & Image Containers
//==================================================================================

#[repr(C)]
#[derive(Debug)]
pub struct GmtGridHeader {
    pub n_columns: u32,
    pub n_rows: u32,
    pub registration: u32,
    /// West, east, south, north.
    pub wesn: [c_double; 4],
    pub z_min: c_double,
    pub z_max: c_double,
    pub inc: [c_double; 2],
    pub z_scale_factor: c_double,
    pub z_add_offset: c_double,
    pub x_units: [c_char; GRID_UNIT_LEN],
    pub y_units: [c_char; GRID_UNIT_LEN],
    pub z_units: [c_char; GRID_UNIT_LEN],
    pub title: [c_char; GRID_TITLE_LEN],
    pub command: [c_char; GRID_COMMAND_LEN],
    pub remark: [c_char; GRID_REMARK_LEN],
    pub type_: c_uint,
    pub bits: c_uint,
    pub complex_mode: c_uint,
    /// Padded column count.
    pub mx: c_uint,
    /// Padded row count.
    pub my: c_uint,
    pub nm: usize,
    pub size: usize,
    pub n_alloc: usize,
    pub trendmode: c_uint,
    pub arrangement: c_uint,
    pub n_bands: c_uint,
    /// West, east, south, north padding in nodes.
    pub pad: [c_uint; 4],
    pub mem_layout: [c_char; 4],
    pub nan_value: c_float,
    pub xy_off: c_double,
    pub proj_ref_proj4: *mut c_char,
    pub proj_ref_wkt: *mut c_char,
    pub proj_ref_epsg: c_int,
    pub hidden: *mut c_void,
}

impl GmtGridHeader {
    /// An all-zero header with null pointers.
    pub fn zeroed() -> Self {
        // SAFETY: every field is an integer, a float, a fixed array of those,
        // or a raw pointer; the all-zero bit pattern is valid for each.
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct GmtGrid {
    pub header: *mut GmtGridHeader,
    /// `mx * my` samples, row-major, north row first, padding included.
    pub data: *mut c_float,
    pub x: *mut c_double,
    pub y: *mut c_double,
    pub hidden: *mut c_void,
}

#[repr(C)]
#[derive(Debug)]
pub struct GmtImage {
    pub type_: c_int,
    pub colormap: *mut c_int,
    pub n_indexed_colors: c_int,
    pub header: *mut GmtGridHeader,
    pub data: *mut u8,
    pub alpha: *mut u8,
    pub color_interp: *const c_char,
    pub x: *mut c_double,
    pub y: *mut c_double,
    pub hidden: *mut c_void,
}

//==================================================================================
// IV. Entry-Point Signatures
//==================================================================================

/// Diagnostic sink the engine calls for every line it prints.
pub type PrintFunc = unsafe extern "C" fn(stream: *mut c_void, message: *const c_char) -> c_int;

pub type CreateSessionFn = unsafe extern "C" fn(
    tag: *const c_char,
    pad: c_uint,
    mode: c_uint,
    print: Option<PrintFunc>,
) -> *mut c_void;
pub type DestroySessionFn = unsafe extern "C" fn(api: *mut c_void) -> c_int;
pub type GetEnumFn = unsafe extern "C" fn(api: *mut c_void, key: *const c_char) -> c_int;
pub type GetDefaultFn =
    unsafe extern "C" fn(api: *mut c_void, keyword: *const c_char, value: *mut c_char) -> c_int;
pub type GetCommonFn =
    unsafe extern "C" fn(api: *mut c_void, option: c_uint, par: *mut c_double) -> c_int;
pub type CallModuleFn = unsafe extern "C" fn(
    api: *mut c_void,
    module: *const c_char,
    mode: c_int,
    args: *mut c_void,
) -> c_int;
pub type CreateDataFn = unsafe extern "C" fn(
    api: *mut c_void,
    family: c_uint,
    geometry: c_uint,
    mode: c_uint,
    dim: *const u64,
    range: *const c_double,
    inc: *const c_double,
    registration: c_uint,
    pad: c_int,
    data: *mut c_void,
) -> *mut c_void;
pub type PutVectorFn = unsafe extern "C" fn(
    api: *mut c_void,
    vector: *mut c_void,
    col: c_uint,
    type_: c_uint,
    data: *mut c_void,
) -> c_int;
pub type PutStringsFn = unsafe extern "C" fn(
    api: *mut c_void,
    family: c_uint,
    object: *mut c_void,
    array: *mut *mut c_char,
) -> c_int;
pub type PutMatrixFn = unsafe extern "C" fn(
    api: *mut c_void,
    matrix: *mut c_void,
    type_: c_uint,
    pad: c_int,
    data: *mut c_void,
) -> c_int;
pub type ReadDataFn = unsafe extern "C" fn(
    api: *mut c_void,
    family: c_uint,
    method: c_uint,
    geometry: c_uint,
    mode: c_uint,
    wesn: *const c_double,
    input: *const c_char,
    data: *mut c_void,
) -> *mut c_void;
pub type WriteDataFn = unsafe extern "C" fn(
    api: *mut c_void,
    family: c_uint,
    method: c_uint,
    geometry: c_uint,
    mode: c_uint,
    wesn: *const c_double,
    output: *const c_char,
    data: *mut c_void,
) -> c_int;
pub type OpenVirtualFileFn = unsafe extern "C" fn(
    api: *mut c_void,
    family: c_uint,
    geometry: c_uint,
    direction: c_uint,
    data: *mut c_void,
    name: *mut c_char,
) -> c_int;
pub type CloseVirtualFileFn = unsafe extern "C" fn(api: *mut c_void, name: *const c_char) -> c_int;
pub type InquireVirtualFileFn =
    unsafe extern "C" fn(api: *mut c_void, name: *const c_char) -> c_uint;
pub type ReadVirtualFileFn =
    unsafe extern "C" fn(api: *mut c_void, name: *const c_char) -> *mut c_void;
pub type ExtractRegionFn =
    unsafe extern "C" fn(api: *mut c_void, file: *mut c_char, wesn: *mut c_double) -> c_int;

/// The complete set of entry points a session needs, bound once per library.
#[derive(Clone, Copy)]
pub struct FunctionTable {
    pub create_session: CreateSessionFn,
    pub destroy_session: DestroySessionFn,
    pub get_enum: GetEnumFn,
    pub get_default: GetDefaultFn,
    pub get_common: GetCommonFn,
    pub call_module: CallModuleFn,
    pub create_data: CreateDataFn,
    pub put_vector: PutVectorFn,
    pub put_strings: PutStringsFn,
    pub put_matrix: PutMatrixFn,
    pub read_data: ReadDataFn,
    pub write_data: WriteDataFn,
    pub open_virtualfile: OpenVirtualFileFn,
    pub close_virtualfile: CloseVirtualFileFn,
    pub inquire_virtualfile: InquireVirtualFileFn,
    pub read_virtualfile: ReadVirtualFileFn,
    pub extract_region: ExtractRegionFn,
}

/// Exported symbol names, in `FunctionTable` field order.
pub const REQUIRED_SYMBOLS: [&str; 17] = [
    "GMT_Create_Session",
    "GMT_Destroy_Session",
    "GMT_Get_Enum",
    "GMT_Get_Default",
    "GMT_Get_Common",
    "GMT_Call_Module",
    "GMT_Create_Data",
    "GMT_Put_Vector",
    "GMT_Put_Strings",
    "GMT_Put_Matrix",
    "GMT_Read_Data",
    "GMT_Write_Data",
    "GMT_Open_VirtualFile",
    "GMT_Close_VirtualFile",
    "GMT_Inquire_VirtualFile",
    "GMT_Read_VirtualFile",
    "GMT_Extract_Region",
];

impl std::fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTable")
            .field("entry_points", &REQUIRED_SYMBOLS.len())
            .finish()
    }
}
