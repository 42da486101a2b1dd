//! Entry points of the in-process engine.
//!
//! Numeric constants follow the engine's own table closely enough that
//! composite expressions (`BASE|MODIFIER`) decode unambiguously here. Nothing
//! in this file may panic: unwinding out of an `extern "C"` function aborts.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_double, c_int, c_uint, c_void};
use std::ptr;

use chrono::{NaiveDate, NaiveDateTime};

use super::dataset::{GridSpec, OwnedDataset, OwnedGrid, OwnedImage, SegmentSpec, TableSpec};
use crate::ffi::abi::{PrintFunc, NOTSET};

/// A session tag the engine refuses to create.
pub const FAIL_TAG: &str = "mock-fail";

const ENUMS: &[(&str, i32)] = &[
    ("GMT_IS_DATASET", 0),
    ("GMT_IS_GRID", 1),
    ("GMT_IS_IMAGE", 2),
    ("GMT_IS_PALETTE", 3),
    ("GMT_IS_POSTSCRIPT", 4),
    ("GMT_IS_MATRIX", 5),
    ("GMT_IS_VECTOR", 6),
    ("GMT_IS_CUBE", 7),
    ("GMT_VIA_VECTOR", 100),
    ("GMT_VIA_MATRIX", 200),
    ("GMT_IS_FILE", 0),
    ("GMT_IS_DUPLICATE", 3),
    ("GMT_IS_REFERENCE", 4),
    ("GMT_IN", 0),
    ("GMT_OUT", 1),
    ("GMT_IS_NONE", 16),
    ("GMT_IS_POINT", 1),
    ("GMT_IS_LINE", 2),
    ("GMT_IS_POLYGON", 4),
    ("GMT_IS_PLP", 7),
    ("GMT_IS_SURFACE", 8),
    ("GMT_IS_VOLUME", 32),
    ("GMT_CHAR", 0),
    ("GMT_UCHAR", 1),
    ("GMT_SHORT", 2),
    ("GMT_USHORT", 3),
    ("GMT_INT", 4),
    ("GMT_UINT", 5),
    ("GMT_LONG", 6),
    ("GMT_ULONG", 7),
    ("GMT_FLOAT", 8),
    ("GMT_DOUBLE", 9),
    ("GMT_TEXT", 16),
    ("GMT_DATETIME", 32),
    ("GMT_CONTAINER_ONLY", 1),
    ("GMT_IS_OUTPUT", 1024),
    ("GMT_GRID_IS_CARTESIAN", 0),
    ("GMT_GRID_IS_GEO", 4),
    ("GMT_WITH_STRINGS", 32),
    ("GMT_GRID_NODE_REG", 0),
    ("GMT_GRID_PIXEL_REG", 1),
    ("GMT_SESSION_EXTERNAL", 2),
    ("GMT_PAD_DEFAULT", 2),
    ("GMT_VF_LEN", 16),
    ("GMT_MODULE_CMD", -7),
    ("GMT_READ_NORMAL", 0),
    ("GMT_WRITE_SET", 0),
];

const DEFAULTS: &[(&str, &str)] = &[
    ("API_VERSION", "6.5.0"),
    ("API_PAD", "2"),
    ("API_SHAREDIR", "/opt/gmt/share"),
    ("API_PLUGINDIR", "/opt/gmt/lib/gmt/plugins"),
    ("API_LIBRARY", "mock-engine"),
    ("API_CORES", "4"),
    ("API_GRID_LAYOUT", "rows"),
    ("API_IMAGE_LAYOUT", "TRBa"),
    ("API_BIN_VERSION", "6.5.0"),
];

const FAMILY_DATASET: u32 = 0;
const FAMILY_GRID: u32 = 1;
const FAMILY_IMAGE: u32 = 2;
const FAMILY_MATRIX: u32 = 5;
const FAMILY_VECTOR: u32 = 6;
const VIA_VECTOR: u32 = 100;
const VIA_MATRIX: u32 = 200;
const MODE_GRID_IS_GEO: u32 = 4;
const TYPE_TEXT: u32 = 16;
const TYPE_DATETIME: u32 = 32;
const MODULE_CMD: c_int = -7;

pub fn enum_value(name: &str) -> i32 {
    ENUMS
        .iter()
        .find(|(key, _)| *key == name)
        .map_or(NOTSET, |(_, value)| *value)
}

//==================================================================================
// I. Objects
//==================================================================================

pub struct VectorObject {
    n_columns: usize,
    n_rows: usize,
    columns: RefCell<Vec<Option<Vec<f64>>>>,
    strings: RefCell<Option<Vec<String>>>,
}

#[derive(Debug, Clone, Copy)]
struct GridFrame {
    wesn: [f64; 4],
    inc: [f64; 2],
    registration: u32,
    geographic: bool,
}

pub struct MatrixObject {
    n_columns: usize,
    n_rows: usize,
    grid: Option<GridFrame>,
    values: RefCell<Option<Vec<f64>>>,
}

pub enum MockObject {
    Vector(VectorObject),
    Matrix(MatrixObject),
    Dataset(OwnedDataset),
    Grid(OwnedGrid),
    Image(OwnedImage),
}

impl MockObject {
    fn handle(&self) -> *mut c_void {
        match self {
            Self::Vector(vector) => vector as *const VectorObject as *mut c_void,
            Self::Matrix(matrix) => matrix as *const MatrixObject as *mut c_void,
            Self::Dataset(dataset) => dataset.as_ptr() as *mut c_void,
            Self::Grid(grid) => grid.as_ptr() as *mut c_void,
            Self::Image(image) => image.as_ptr() as *mut c_void,
        }
    }
}

/// The logical content of an object, independent of how it was supplied.
enum Content {
    Tables(Vec<TableSpec>),
    Grid(GridSpec),
}

impl VectorObject {
    fn to_tables(&self) -> Result<Vec<TableSpec>, String> {
        let columns = self
            .columns
            .borrow()
            .iter()
            .enumerate()
            .map(|(index, column)| {
                column
                    .clone()
                    .ok_or_else(|| format!("vector column {} was never set", index))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut segment = SegmentSpec::numeric(columns);
        if let Some(strings) = self.strings.borrow().as_ref() {
            segment = segment.with_text(strings.iter().cloned().map(Some).collect());
        }
        Ok(vec![TableSpec::single(segment)])
    }
}

impl MatrixObject {
    fn to_content(&self, pad: u32) -> Result<Content, String> {
        let values = self
            .values
            .borrow()
            .clone()
            .ok_or_else(|| "matrix data was never set".to_string())?;
        if values.len() != self.n_columns * self.n_rows {
            return Err("matrix size does not match its dimensions".into());
        }
        match self.grid {
            Some(frame) => {
                let mut spec = GridSpec::new(
                    frame.wesn,
                    frame.inc,
                    frame.registration,
                    self.n_columns,
                    self.n_rows,
                    values.iter().map(|&v| v as f32).collect(),
                );
                spec.pad = [pad; 4];
                spec.geographic = frame.geographic;
                Ok(Content::Grid(spec))
            }
            None => {
                let columns = (0..self.n_columns)
                    .map(|col| {
                        (0..self.n_rows)
                            .map(|row| values[row * self.n_columns + col])
                            .collect()
                    })
                    .collect();
                Ok(Content::Tables(vec![TableSpec::single(SegmentSpec::numeric(columns))]))
            }
        }
    }
}

//==================================================================================
// II. Session State
//==================================================================================

struct VirtualEntry {
    family: u32,
    output: bool,
    data: *mut c_void,
}

pub struct MockSession {
    pub tag: String,
    pub pad: u32,
    print: Option<PrintFunc>,
    objects: RefCell<Vec<Box<MockObject>>>,
    virtual_files: RefCell<HashMap<String, VirtualEntry>>,
    next_id: Cell<u32>,
    region: Cell<Option<[f64; 4]>>,
    pub create_data_calls: Cell<usize>,
    pub fail_close_virtualfile: Cell<bool>,
    pub fail_destroy: Cell<bool>,
    pub module_calls: RefCell<Vec<String>>,
}

impl MockSession {
    fn new(tag: String, pad: u32, print: Option<PrintFunc>) -> Self {
        Self {
            tag,
            pad,
            print,
            objects: RefCell::new(Vec::new()),
            virtual_files: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
            region: Cell::new(None),
            create_data_calls: Cell::new(0),
            fail_close_virtualfile: Cell::new(false),
            fail_destroy: Cell::new(false),
            module_calls: RefCell::new(Vec::new()),
        }
    }

    fn print(&self, message: &str) {
        emit(self.print, message);
    }

    fn error(&self, message: &str) {
        self.print(&format!("mock [ERROR]: {}", message));
    }

    pub fn open_virtual_files(&self) -> usize {
        self.virtual_files.borrow().len()
    }

    pub fn virtual_file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.virtual_files.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn object_count(&self) -> usize {
        self.objects.borrow().len()
    }

    /// Registers an object the host did not create, returning its handle.
    pub fn insert(&self, object: MockObject) -> *mut c_void {
        let boxed = Box::new(object);
        let handle = boxed.handle();
        self.objects.borrow_mut().push(boxed);
        handle
    }

    fn object(&self, handle: *mut c_void) -> Option<&MockObject> {
        let objects = self.objects.borrow();
        let found = objects.iter().find(|object| object.handle() == handle)?;
        // SAFETY: boxed objects are neither moved nor dropped before the session is.
        Some(unsafe { &*(found.as_ref() as *const MockObject) })
    }

    fn content_of(&self, handle: *mut c_void) -> Result<Content, String> {
        match self.object(handle).ok_or("unknown data object")? {
            MockObject::Vector(vector) => vector.to_tables().map(Content::Tables),
            MockObject::Matrix(matrix) => matrix.to_content(self.pad),
            MockObject::Dataset(dataset) => Ok(Content::Tables(dataset.tables.clone())),
            MockObject::Grid(grid) => Ok(Content::Grid(grid.spec.clone())),
            MockObject::Image(_) => Err("images cannot be converted".into()),
        }
    }

    /// Data registered under a virtual file name; `None` for ordinary paths.
    fn virtual_input(&self, name: &str) -> Result<Option<*mut c_void>, String> {
        match self.virtual_files.borrow().get(name) {
            Some(entry) if entry.data.is_null() => {
                Err(format!("virtual file {} holds no data", name))
            }
            Some(entry) => Ok(Some(entry.data)),
            None if name.starts_with("@GMTAPI@") => Err(format!("unknown virtual file {}", name)),
            None => Ok(None),
        }
    }

    fn read_content(&self, source: &str) -> Result<Content, String> {
        match self.virtual_input(source)? {
            Some(data) => self.content_of(data),
            None => read_table_file(source).map(Content::Tables),
        }
    }

    fn store_output(&self, name: &str, content: Content) -> Result<(), String> {
        let family = match self.virtual_files.borrow().get(name) {
            Some(entry) if entry.output => entry.family,
            Some(_) => return Err(format!("virtual file {} is an input", name)),
            None => return write_table_file(name, content),
        };
        let object = match (family, content) {
            (FAMILY_DATASET, Content::Tables(tables)) => MockObject::Dataset(OwnedDataset::new(tables)),
            (FAMILY_GRID, Content::Grid(mut spec)) => {
                spec.pad = [self.pad; 4];
                MockObject::Grid(OwnedGrid::new(spec))
            }
            (family, _) => {
                return Err(format!("cannot write this data to a family {} virtual file", family))
            }
        };
        let handle = self.insert(object);
        if let Some(entry) = self.virtual_files.borrow_mut().get_mut(name) {
            entry.data = handle;
        }
        Ok(())
    }

    fn run_module(&self, module: &str, args: &[String]) -> c_int {
        self.module_calls
            .borrow_mut()
            .push(format!("{} {}", module, args.join(" ")).trim_end().to_string());
        for arg in args {
            if let Some(region) = arg.strip_prefix("-R").and_then(parse_region) {
                self.region.set(Some(region));
            }
        }
        match module {
            "read" | "write" | "convert" => {
                self.print(&format!("{} [INFORMATION]: processing {}", module, args.join(" ")));
                let files: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();
                if files.len() != 2 {
                    self.error(&format!("{} expects one input and one output", module));
                    return 72;
                }
                let result = self
                    .read_content(files[0])
                    .and_then(|content| self.store_output(files[1], content));
                match result {
                    Ok(()) => 0,
                    Err(message) => {
                        self.error(&message);
                        1
                    }
                }
            }
            "region" => 0,
            _ => {
                self.error(&format!("Shared GMT module not found: {}", module));
                16
            }
        }
    }
}

fn emit(print: Option<PrintFunc>, message: &str) {
    if let (Some(print), Ok(line)) = (print, CString::new(message)) {
        // SAFETY: the callback was registered by the host for this purpose.
        unsafe {
            print(ptr::null_mut(), line.as_ptr());
        }
    }
}

unsafe fn session_ref<'a>(api: *mut c_void) -> Option<&'a MockSession> {
    (api as *const MockSession).as_ref()
}

unsafe fn read_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

//==================================================================================
// III. Value Conversions
//==================================================================================

unsafe fn read_numbers(type_: u32, data: *const c_void, len: usize) -> Option<Vec<f64>> {
    if len == 0 {
        return Some(Vec::new());
    }
    if data.is_null() {
        return None;
    }
    macro_rules! read {
        ($t:ty) => {
            std::slice::from_raw_parts(data as *const $t, len)
                .iter()
                .map(|&v| v as f64)
                .collect()
        };
    }
    Some(match type_ {
        0 => read!(i8),
        1 => read!(u8),
        2 => read!(i16),
        3 => read!(u16),
        4 => read!(i32),
        5 => read!(u32),
        6 => read!(i64),
        7 => read!(u64),
        8 => read!(f32),
        9 => read!(f64),
        _ => return None,
    })
}

unsafe fn read_strings(data: *const *const c_char, len: usize) -> Option<Vec<String>> {
    if len == 0 {
        return Some(Vec::new());
    }
    if data.is_null() {
        return None;
    }
    std::slice::from_raw_parts(data, len)
        .iter()
        .map(|&s| read_str(s))
        .collect()
}

/// Seconds since the Unix epoch for ISO-like text, NaN otherwise.
pub fn parse_time(text: &str) -> f64 {
    let text = text.trim();
    let parsed = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        });
    match parsed {
        Some(time) => {
            let utc = time.and_utc();
            utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) * 1e-9
        }
        None => text.parse().unwrap_or(f64::NAN),
    }
}

fn parse_region(text: &str) -> Option<[f64; 4]> {
    let parts: Vec<f64> = text
        .split('/')
        .map(|p| p.parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [w, e, s, n] => Some([*w, *e, *s, *n]),
        _ => None,
    }
}

//==================================================================================
// IV. Text Files
//==================================================================================

pub fn read_table_file(path: &str) -> Result<Vec<TableSpec>, String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path, e))?;
    let mut table = TableSpec::default();
    let mut segment: Option<SegmentSpec> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('#') {
            table.headers.push(header.trim().to_string());
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            if let Some(done) = segment.take() {
                table.segments.push(finish_segment(done));
            }
            let header = header.trim();
            segment = Some(SegmentSpec {
                header: (!header.is_empty()).then(|| header.to_string()),
                ..SegmentSpec::default()
            });
            continue;
        }

        let current = segment.get_or_insert_with(SegmentSpec::default);
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let rows = current.text.as_ref().map_or(0, Vec::len);
        if rows == 0 {
            let n_numeric = tokens.iter().take_while(|t| t.parse::<f64>().is_ok()).count();
            current.columns = vec![Vec::new(); n_numeric];
        }
        let n_columns = current.columns.len();
        for (index, column) in current.columns.iter_mut().enumerate() {
            let value = tokens.get(index).and_then(|t| t.parse().ok()).unwrap_or(f64::NAN);
            column.push(value);
        }
        let rest = tokens.get(n_columns..).unwrap_or(&[]).join(" ");
        current
            .text
            .get_or_insert_with(Vec::new)
            .push((!rest.is_empty()).then_some(rest));
    }
    if let Some(done) = segment.take() {
        table.segments.push(finish_segment(done));
    }
    Ok(vec![table])
}

fn finish_segment(mut segment: SegmentSpec) -> SegmentSpec {
    if segment
        .text
        .as_ref()
        .is_some_and(|rows| rows.iter().all(Option::is_none))
    {
        segment.text = None;
    }
    segment
}

fn write_table_file(path: &str, content: Content) -> Result<(), String> {
    let Content::Tables(tables) = content else {
        return Err(format!("cannot write a grid to {}", path));
    };
    let mut out = String::new();
    for table in &tables {
        for header in &table.headers {
            out.push_str(&format!("# {}\n", header));
        }
        let multiple = table.segments.len() > 1;
        for segment in &table.segments {
            if multiple || segment.header.is_some() {
                out.push_str(&format!("> {}\n", segment.header.as_deref().unwrap_or("")));
            }
            for row in 0..segment.n_rows() {
                let mut fields: Vec<String> = segment
                    .columns
                    .iter()
                    .map(|column| column.get(row).map_or("NaN".to_string(), |v| v.to_string()))
                    .collect();
                if let Some(Some(text)) = segment.text.as_ref().and_then(|rows| rows.get(row)) {
                    if !text.is_empty() {
                        fields.push(text.clone());
                    }
                }
                out.push_str(&fields.join("\t"));
                out.push('\n');
            }
        }
    }
    std::fs::write(path, out).map_err(|e| format!("cannot write {}: {}", path, e))
}

//==================================================================================
// V. Entry Points
//==================================================================================

pub unsafe extern "C" fn create_session(
    tag: *const c_char,
    pad: c_uint,
    _mode: c_uint,
    print: Option<PrintFunc>,
) -> *mut c_void {
    let tag = read_str(tag).unwrap_or_default();
    if tag == FAIL_TAG {
        emit(print, "mock [ERROR]: Failed to create a session");
        return ptr::null_mut();
    }
    emit(print, &format!("mock [INFORMATION]: session '{}' created", tag));
    Box::into_raw(Box::new(MockSession::new(tag, pad, print))) as *mut c_void
}

pub unsafe extern "C" fn destroy_session(api: *mut c_void) -> c_int {
    if api.is_null() {
        return 1;
    }
    let session = Box::from_raw(api as *mut MockSession);
    if session.fail_destroy.get() {
        session.error("Failed to destroy the session");
        return 1;
    }
    0
}

pub unsafe extern "C" fn get_enum(_api: *mut c_void, key: *const c_char) -> c_int {
    read_str(key).map_or(NOTSET, |name| enum_value(&name))
}

pub unsafe extern "C" fn get_default(api: *mut c_void, keyword: *const c_char, value: *mut c_char) -> c_int {
    let (Some(session), Some(key)) = (session_ref(api), read_str(keyword)) else {
        return 1;
    };
    match DEFAULTS.iter().find(|(name, _)| *name == key) {
        Some((_, text)) if !value.is_null() => {
            ptr::copy_nonoverlapping(text.as_ptr() as *const c_char, value, text.len());
            *value.add(text.len()) = 0;
            0
        }
        _ => {
            session.error(&format!("Unrecognized keyword {}", key));
            1
        }
    }
}

pub unsafe extern "C" fn get_common(api: *mut c_void, option: c_uint, par: *mut c_double) -> c_int {
    let Some(session) = session_ref(api) else {
        return -1;
    };
    match (char::from_u32(option), session.region.get()) {
        (Some('R'), Some(region)) if !par.is_null() => {
            ptr::copy_nonoverlapping(region.as_ptr(), par, 4);
            0
        }
        _ => -1,
    }
}

pub unsafe extern "C" fn call_module(
    api: *mut c_void,
    module: *const c_char,
    mode: c_int,
    args: *mut c_void,
) -> c_int {
    let (Some(session), Some(module)) = (session_ref(api), read_str(module)) else {
        return 1;
    };
    let args: Vec<String> = if mode == MODULE_CMD {
        read_str(args as *const c_char)
            .map(|line| line.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    } else if mode >= 0 {
        match read_strings(args as *const *const c_char, mode as usize) {
            Some(list) => list,
            None => {
                session.error("argument list is null");
                return 1;
            }
        }
    } else {
        session.error(&format!("unsupported module mode {}", mode));
        return 1;
    };
    session.run_module(&module, &args)
}

pub unsafe extern "C" fn create_data(
    api: *mut c_void,
    family: c_uint,
    _geometry: c_uint,
    mode: c_uint,
    dim: *const u64,
    range: *const c_double,
    inc: *const c_double,
    registration: c_uint,
    _pad: c_int,
    _data: *mut c_void,
) -> *mut c_void {
    let Some(session) = session_ref(api) else {
        return ptr::null_mut();
    };
    session.create_data_calls.set(session.create_data_calls.get() + 1);
    let dims = (!dim.is_null()).then(|| std::slice::from_raw_parts(dim, 4));
    let (base, via) = (family % 100, family / 100 * 100);

    let object = match (base, via, dims) {
        (FAMILY_DATASET, VIA_VECTOR, Some(d)) | (FAMILY_VECTOR, _, Some(d)) => {
            let (n_columns, n_rows) = (d[0] as usize, d[1] as usize);
            MockObject::Vector(VectorObject {
                n_columns,
                n_rows,
                columns: RefCell::new(vec![None; n_columns]),
                strings: RefCell::new(None),
            })
        }
        (FAMILY_DATASET, VIA_MATRIX, Some(d)) | (FAMILY_MATRIX, _, Some(d)) => {
            MockObject::Matrix(MatrixObject {
                n_columns: d[0] as usize,
                n_rows: d[1] as usize,
                grid: None,
                values: RefCell::new(None),
            })
        }
        (FAMILY_GRID, VIA_MATRIX, _) if !range.is_null() && !inc.is_null() => {
            let wesn = [*range, *range.add(1), *range.add(2), *range.add(3)];
            let increments = [*inc, *inc.add(1)];
            let nodes = |low: f64, high: f64, step: f64| {
                ((high - low) / step).round() as usize + usize::from(registration == 0)
            };
            let (n_columns, n_rows) = match dims {
                Some(d) => (d[0] as usize, d[1] as usize),
                None => (
                    nodes(wesn[0], wesn[1], increments[0]),
                    nodes(wesn[2], wesn[3], increments[1]),
                ),
            };
            MockObject::Matrix(MatrixObject {
                n_columns,
                n_rows,
                grid: Some(GridFrame {
                    wesn,
                    inc: increments,
                    registration,
                    geographic: mode & MODE_GRID_IS_GEO != 0,
                }),
                values: RefCell::new(None),
            })
        }
        _ => {
            session.error(&format!("Cannot create a container for family {}", family));
            return ptr::null_mut();
        }
    };
    session.insert(object)
}

pub unsafe extern "C" fn put_vector(
    api: *mut c_void,
    vector: *mut c_void,
    col: c_uint,
    type_: c_uint,
    data: *mut c_void,
) -> c_int {
    let Some(session) = session_ref(api) else {
        return 1;
    };
    let Some(MockObject::Vector(target)) = session.object(vector) else {
        session.error("GMT_Put_Vector expects a vector container");
        return 1;
    };
    let col = col as usize;
    if col >= target.n_columns {
        session.error(&format!("column {} is out of range", col));
        return 1;
    }
    let values = if type_ == TYPE_TEXT || type_ == TYPE_DATETIME {
        read_strings(data as *const *const c_char, target.n_rows)
            .map(|strings| strings.iter().map(|s| parse_time(s)).collect())
    } else {
        read_numbers(type_, data, target.n_rows)
    };
    match values {
        Some(values) => {
            target.columns.borrow_mut()[col] = Some(values);
            0
        }
        None => {
            session.error(&format!("unsupported data type {}", type_));
            1
        }
    }
}

pub unsafe extern "C" fn put_strings(
    api: *mut c_void,
    _family: c_uint,
    object: *mut c_void,
    array: *mut *mut c_char,
) -> c_int {
    let Some(session) = session_ref(api) else {
        return 1;
    };
    let Some(MockObject::Vector(target)) = session.object(object) else {
        session.error("GMT_Put_Strings expects a vector container");
        return 1;
    };
    match read_strings(array as *const *const c_char, target.n_rows) {
        Some(strings) => {
            *target.strings.borrow_mut() = Some(strings);
            0
        }
        None => {
            session.error("string array is null");
            1
        }
    }
}

pub unsafe extern "C" fn put_matrix(
    api: *mut c_void,
    matrix: *mut c_void,
    type_: c_uint,
    _pad: c_int,
    data: *mut c_void,
) -> c_int {
    let Some(session) = session_ref(api) else {
        return 1;
    };
    let Some(MockObject::Matrix(target)) = session.object(matrix) else {
        session.error("GMT_Put_Matrix expects a matrix container");
        return 1;
    };
    match read_numbers(type_, data, target.n_columns * target.n_rows) {
        Some(values) => {
            *target.values.borrow_mut() = Some(values);
            0
        }
        None => {
            session.error(&format!("unsupported matrix type {}", type_));
            1
        }
    }
}

pub unsafe extern "C" fn read_data(
    api: *mut c_void,
    family: c_uint,
    _method: c_uint,
    _geometry: c_uint,
    _mode: c_uint,
    _wesn: *const c_double,
    input: *const c_char,
    _data: *mut c_void,
) -> *mut c_void {
    let (Some(session), Some(input)) = (session_ref(api), read_str(input)) else {
        return ptr::null_mut();
    };
    if family != FAMILY_DATASET {
        session.error(&format!("Cannot read family {} from {}", family, input));
        return ptr::null_mut();
    }
    match session.read_content(&input) {
        Ok(Content::Tables(tables)) => session.insert(MockObject::Dataset(OwnedDataset::new(tables))),
        Ok(Content::Grid(_)) => {
            session.error(&format!("{} is not a dataset", input));
            ptr::null_mut()
        }
        Err(message) => {
            session.error(&message);
            ptr::null_mut()
        }
    }
}

pub unsafe extern "C" fn write_data(
    api: *mut c_void,
    _family: c_uint,
    _method: c_uint,
    _geometry: c_uint,
    _mode: c_uint,
    _wesn: *const c_double,
    output: *const c_char,
    data: *mut c_void,
) -> c_int {
    let (Some(session), Some(output)) = (session_ref(api), read_str(output)) else {
        return 1;
    };
    let result = session
        .content_of(data)
        .and_then(|content| write_table_file(&output, content));
    match result {
        Ok(()) => 0,
        Err(message) => {
            session.error(&message);
            1
        }
    }
}

pub unsafe extern "C" fn open_virtualfile(
    api: *mut c_void,
    family: c_uint,
    _geometry: c_uint,
    direction: c_uint,
    data: *mut c_void,
    name: *mut c_char,
) -> c_int {
    let Some(session) = session_ref(api) else {
        return 1;
    };
    // GMT_OUT alone or with GMT_IS_REFERENCE.
    let output = matches!(direction, 1 | 5);
    if !output && data.is_null() {
        session.error("An input virtual file needs data");
        return 1;
    }
    if !data.is_null() && session.object(data).is_none() {
        session.error("Unknown data object for a virtual file");
        return 1;
    }
    if name.is_null() {
        session.error("No buffer for the virtual file name");
        return 1;
    }

    let id = session.next_id.get();
    session.next_id.set(id + 1);
    let vfname = format!("@GMTAPI@-{:06}", id);
    ptr::copy_nonoverlapping(vfname.as_ptr() as *const c_char, name, vfname.len());
    *name.add(vfname.len()) = 0;
    session.virtual_files.borrow_mut().insert(
        vfname,
        VirtualEntry {
            family: family % 100,
            output,
            data,
        },
    );
    0
}

pub unsafe extern "C" fn close_virtualfile(api: *mut c_void, name: *const c_char) -> c_int {
    let (Some(session), Some(name)) = (session_ref(api), read_str(name)) else {
        return 1;
    };
    let removed = session.virtual_files.borrow_mut().remove(&name);
    if removed.is_none() {
        session.error(&format!("No virtual file named {}", name));
        return 1;
    }
    if session.fail_close_virtualfile.get() {
        session.error(&format!("Failed to release {}", name));
        return 1;
    }
    0
}

pub unsafe extern "C" fn inquire_virtualfile(api: *mut c_void, name: *const c_char) -> c_uint {
    let (Some(session), Some(name)) = (session_ref(api), read_str(name)) else {
        return NOTSET as c_uint;
    };
    let family = session.virtual_files.borrow().get(&name).map(|entry| entry.family);
    family.unwrap_or_else(|| {
        session.error(&format!("No virtual file named {}", name));
        NOTSET as c_uint
    })
}

pub unsafe extern "C" fn read_virtualfile(api: *mut c_void, name: *const c_char) -> *mut c_void {
    let (Some(session), Some(name)) = (session_ref(api), read_str(name)) else {
        return ptr::null_mut();
    };
    let data = session
        .virtual_files
        .borrow()
        .get(&name)
        .map_or(ptr::null_mut(), |entry| entry.data);
    if data.is_null() {
        session.error(&format!("Virtual file {} holds no data", name));
    }
    data
}

pub unsafe extern "C" fn extract_region(api: *mut c_void, _file: *mut c_char, wesn: *mut c_double) -> c_int {
    let Some(session) = session_ref(api) else {
        return 1;
    };
    match session.region.get() {
        Some(region) if !wesn.is_null() => {
            ptr::copy_nonoverlapping(region.as_ptr(), wesn, 4);
            0
        }
        _ => {
            session.error("No region has been set");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_table_lookup() {
        assert_eq!(enum_value("GMT_IS_GRID"), 1);
        assert_eq!(enum_value("GMT_VIA_MATRIX"), 200);
        assert_eq!(enum_value("GMT_NOT_A_CONSTANT"), NOTSET);
    }

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time("1970-01-02"), 86400.0);
        assert_eq!(parse_time("1970-01-01T00:00:01.500"), 1.5);
        assert!(parse_time("NaT").is_nan());
        assert_eq!(parse_time("42"), 42.0);
    }

    #[test]
    fn test_table_file_round_trip_keeps_segments_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.txt");
        std::fs::write(&path, "# x y\n> first\n1 2 alpha\n3 4\n> second\n5 6 beta gamma\n").unwrap();

        let tables = read_table_file(path.to_str().unwrap()).unwrap();
        assert_eq!(tables[0].headers, vec!["x y"]);
        let segments = &tables[0].segments;
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].header.as_deref(), Some("first"));
        assert_eq!(segments[0].columns, vec![vec![1.0, 3.0], vec![2.0, 4.0]]);
        assert_eq!(segments[0].text, Some(vec![Some("alpha".to_string()), None]));
        assert_eq!(segments[1].text, Some(vec![Some("beta gamma".to_string())]));

        let copy = dir.path().join("copy.txt");
        write_table_file(copy.to_str().unwrap(), Content::Tables(tables.clone())).unwrap();
        assert_eq!(read_table_file(copy.to_str().unwrap()).unwrap(), tables);
    }
}
