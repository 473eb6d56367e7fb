// src/names/nvml.rs

//! NVML name lookup, loaded at runtime with `libloading`.
//!
//! `Nvml::load` opens the library and calls `nvmlInit_v2`; dropping the
//! value calls `nvmlShutdown`. Nothing here is process-global.

use std::ffi::{CStr, c_char, c_int, c_uint, c_void};

use libloading::{Library, Symbol};
use log::Level;
use thiserror::Error;

use crate::names::NameLookup;
use crate::rop_log;

type NvmlReturn = c_int;
type NvmlDevice = *mut c_void;

const NVML_SUCCESS: NvmlReturn = 0;
const NAME_BUFFER_SIZE: usize = 256;

type FnInit = unsafe extern "C" fn() -> NvmlReturn;
type FnShutdown = unsafe extern "C" fn() -> NvmlReturn;
type FnGetHandleByIndex = unsafe extern "C" fn(index: c_uint, device: *mut NvmlDevice) -> NvmlReturn;
type FnGetName =
    unsafe extern "C" fn(device: NvmlDevice, name: *mut c_char, length: c_uint) -> NvmlReturn;
type FnErrorString = unsafe extern "C" fn(result: NvmlReturn) -> *const c_char;

#[derive(Debug, Error)]
pub enum NvmlError {
    #[error("cannot load {library}: {source}")]
    Load {
        library: String,
        #[source]
        source: libloading::Error,
    },

    #[error("{library} has no symbol {symbol}: {source}")]
    Symbol {
        library: String,
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("nvmlInit failed: {0}")]
    Init(String),
}

pub struct Nvml {
    shutdown: FnShutdown,
    get_handle_by_index: FnGetHandleByIndex,
    get_name: FnGetName,
    error_string: FnErrorString,
    // Keeps the function pointers above valid.
    _lib: Library,
}

impl Nvml {
    pub fn load(library: &str) -> Result<Self, NvmlError> {
        // SAFETY: loading NVML runs its constructors; it has no init-order
        // requirements beyond being loaded once per `Nvml`.
        let lib = unsafe { Library::new(library) }.map_err(|source| NvmlError::Load {
            library: library.to_owned(),
            source,
        })?;

        // SAFETY: the signatures match nvml.h.
        let (init, shutdown, get_handle_by_index, get_name, error_string) = unsafe {
            (
                load_fn::<FnInit>(&lib, library, "nvmlInit_v2")?,
                load_fn::<FnShutdown>(&lib, library, "nvmlShutdown")?,
                load_fn::<FnGetHandleByIndex>(&lib, library, "nvmlDeviceGetHandleByIndex_v2")?,
                load_fn::<FnGetName>(&lib, library, "nvmlDeviceGetName")?,
                load_fn::<FnErrorString>(&lib, library, "nvmlErrorString")?,
            )
        };

        // SAFETY: no arguments; paired with `nvmlShutdown` in `Drop`.
        let rc = unsafe { init() };
        if rc != NVML_SUCCESS {
            return Err(NvmlError::Init(describe(error_string, rc)));
        }
        rop_log!(Level::Debug, "names", "NVML initialised from {}", library);
        Ok(Self { shutdown, get_handle_by_index, get_name, error_string, _lib: lib })
    }

    fn describe(&self, rc: NvmlReturn) -> String {
        describe(self.error_string, rc)
    }

    fn device_name(&self, unit: u32) -> Result<String, String> {
        let mut device: NvmlDevice = std::ptr::null_mut();
        // SAFETY: `device` is a valid out-pointer for the duration of the call.
        let rc = unsafe { (self.get_handle_by_index)(unit as c_uint, &mut device) };
        if rc != NVML_SUCCESS {
            return Err(format!("get device handle: {}", self.describe(rc)));
        }

        let mut buf = [0u8; NAME_BUFFER_SIZE];
        // SAFETY: `buf` is writable for `NAME_BUFFER_SIZE` bytes.
        let rc = unsafe {
            (self.get_name)(device, buf.as_mut_ptr() as *mut c_char, NAME_BUFFER_SIZE as c_uint)
        };
        if rc != NVML_SUCCESS {
            return Err(format!("get device name: {}", self.describe(rc)));
        }
        let name = CStr::from_bytes_until_nul(&buf).map_err(|e| e.to_string())?;
        Ok(name.to_string_lossy().into_owned())
    }
}

fn describe(error_string: FnErrorString, rc: NvmlReturn) -> String {
    // SAFETY: nvmlErrorString returns a static NUL-terminated string.
    let ptr = unsafe { error_string(rc) };
    if ptr.is_null() {
        return format!("NVML error {rc}");
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

impl NameLookup for Nvml {
    fn name(&mut self, unit: u32) -> Option<String> {
        match self.device_name(unit) {
            Ok(name) => Some(name),
            Err(e) => {
                rop_log!(Level::Warn, "names", "GPU {}: NVML lookup failed: {}", unit, e);
                None
            }
        }
    }
}

impl Drop for Nvml {
    fn drop(&mut self) {
        // SAFETY: `nvmlInit_v2` succeeded in `load`, and this runs once.
        let rc = unsafe { (self.shutdown)() };
        if rc != NVML_SUCCESS {
            rop_log!(Level::Warn, "names", "nvmlShutdown failed: {}", self.describe(rc));
        }
    }
}

unsafe fn load_fn<F: Copy>(
    lib: &Library,
    library: &str,
    symbol: &'static str,
) -> Result<F, NvmlError> {
    // SAFETY: caller guarantees `F` matches the symbol's signature.
    let sym: Symbol<F> = unsafe { lib.get(symbol.as_bytes()) }.map_err(|source| {
        NvmlError::Symbol { library: library.to_owned(), symbol, source }
    })?;
    Ok(*sym)
}
