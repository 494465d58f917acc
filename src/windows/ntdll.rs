//! Native API entry points not covered by the `windows` crate features we use

use std::ffi::c_void;

use crate::core::capability::OsVersion;
use crate::platform::{PlatformError, PlatformResult};
use crate::windows::ffi::{
    MemoryCombineInformationEx, SystemCacheInformation, SystemInformationRequest,
};

#[repr(C)]
struct OsVersionInfoExW {
    size: u32,
    major: u32,
    minor: u32,
    build: u32,
    platform_id: u32,
    csd_version: [u16; 128],
    service_pack_major: u16,
    service_pack_minor: u16,
    suite_mask: u16,
    product_type: u8,
    reserved: u8,
}

#[link(name = "ntdll")]
extern "system" {
    fn NtSetSystemInformation(class: i32, information: *mut c_void, length: u32) -> i32;
    fn RtlNtStatusToDosError(status: i32) -> u32;
    fn RtlGetVersion(info: *mut OsVersionInfoExW) -> i32;
}

/// Real kernel version; not subject to the manifest-based version lie.
pub fn os_version() -> OsVersion {
    let mut info = OsVersionInfoExW {
        size: std::mem::size_of::<OsVersionInfoExW>() as u32,
        major: 0,
        minor: 0,
        build: 0,
        platform_id: 0,
        csd_version: [0; 128],
        service_pack_major: 0,
        service_pack_minor: 0,
        suite_mask: 0,
        product_type: 0,
        reserved: 0,
    };
    let status = unsafe { RtlGetVersion(&mut info) };
    if status < 0 {
        return OsVersion::UNKNOWN;
    }
    OsVersion::new(info.major, info.minor, info.build)
}

/// Issue one `NtSetSystemInformation` call with a stack-owned payload.
pub fn set_system_information(request: SystemInformationRequest, is_64bit: bool) -> PlatformResult<()> {
    let class = request.information_class();
    let status = unsafe {
        match request {
            SystemInformationRequest::MemoryList(command) => {
                let mut value = command as i32;
                call(class, &mut value)
            }
            SystemInformationRequest::FileCacheUnlimited => match SystemCacheInformation::unlimited(is_64bit) {
                SystemCacheInformation::Bits32(mut info) => call(class, &mut info),
                SystemCacheInformation::Bits64(mut info) => call(class, &mut info),
            },
            SystemInformationRequest::CombinePhysicalMemory => {
                let mut info = MemoryCombineInformationEx::default();
                call(class, &mut info)
            }
        }
    };

    if status != 0 {
        let code = unsafe { RtlNtStatusToDosError(status) };
        return Err(PlatformError::from_code(code));
    }
    Ok(())
}

unsafe fn call<T>(class: i32, payload: &mut T) -> i32 {
    NtSetSystemInformation(
        class,
        payload as *mut T as *mut c_void,
        std::mem::size_of::<T>() as u32,
    )
}
