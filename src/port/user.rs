//! User-facing port operations
//!
//! The syscall-boundary shims: every pointer argument is an untrusted user
//! address. Names are copied in bounded, results are copied out through
//! the user-copy helpers, and payloads go through the `User` buffer
//! variants, which is what routes the copies through the user-memory
//! path; the matching `USE_USER_MEMCPY` bit is set alongside for the
//! flag-word ABI, and `INTERRUPTABLE` is forced on so a blocked user task
//! can be signalled away. Any pointer that resolves into the kernel
//! address range is rejected with `BadUserMemory` before anything else
//! happens.

use crate::config::MAX_OS_NAME_LEN;
use crate::mm::usercopy::{self, is_kernel_address, UserPtr};
use crate::port::{
    self, PortError, PortFlags, PortId, PortResult, SinkBuffer, SourceBuffer,
};
use crate::task::TaskId;

/// Copy a port name in from user space, bounded by `MAX_OS_NAME_LEN`
fn copy_name_from_user(uname: UserPtr, out: &mut [u8; MAX_OS_NAME_LEN]) -> PortResult<usize> {
    if is_kernel_address(uname.addr()) {
        return Err(PortError::BadUserMemory);
    }
    unsafe { usercopy::strlcpy_from_user(out, uname) }.map_err(|_| PortError::BadUserMemory)
}

/// Create a port; a null name pointer creates an unnamed port
pub fn create(queue_length: i32, uname: UserPtr) -> PortResult<PortId> {
    if uname.is_null() {
        return port::create(queue_length, None);
    }

    let mut name = [0u8; MAX_OS_NAME_LEN];
    let n = copy_name_from_user(uname, &mut name)?;
    let name = core::str::from_utf8(&name[..n]).map_err(|_| PortError::InvalidArgs)?;
    port::create(queue_length, Some(name))
}

/// Close a port
pub fn close(id: PortId) -> PortResult<()> {
    port::close(id)
}

/// Delete a port
pub fn delete(id: PortId) -> PortResult<()> {
    port::delete(id)
}

/// Find a port by name
pub fn find(uname: UserPtr) -> PortResult<PortId> {
    if uname.is_null() {
        return Err(PortError::InvalidArgs);
    }

    let mut name = [0u8; MAX_OS_NAME_LEN];
    let n = copy_name_from_user(uname, &mut name)?;
    let name = core::str::from_utf8(&name[..n]).map_err(|_| PortError::InvalidArgs)?;
    port::find(name)
}

/// Snapshot a port's metadata into a user buffer
pub fn get_info(id: PortId, uinfo: UserPtr) -> PortResult<()> {
    if uinfo.is_null() {
        return Err(PortError::InvalidArgs);
    }
    if is_kernel_address(uinfo.addr()) {
        return Err(PortError::BadUserMemory);
    }

    let info = port::get_info(id)?;
    unsafe { usercopy::write_user(uinfo, info) }.map_err(|_| PortError::BadUserMemory)
}

/// Iterate the ports owned by a task; the cursor lives in user memory
pub fn get_next_info(owner: TaskId, ucookie: UserPtr, uinfo: UserPtr) -> PortResult<()> {
    if ucookie.is_null() || uinfo.is_null() {
        return Err(PortError::InvalidArgs);
    }
    if is_kernel_address(ucookie.addr()) || is_kernel_address(uinfo.addr()) {
        return Err(PortError::BadUserMemory);
    }

    let cookie: u32 =
        unsafe { usercopy::read_user(ucookie) }.map_err(|_| PortError::BadUserMemory)?;

    let (info, next) = port::get_next_info(owner, cookie)?;

    unsafe { usercopy::write_user(ucookie, next) }.map_err(|_| PortError::BadUserMemory)?;
    unsafe { usercopy::write_user(uinfo, info) }.map_err(|_| PortError::BadUserMemory)
}

/// Length of the next readable message (interruptible immediate form)
pub fn buffer_size(id: PortId) -> PortResult<usize> {
    port::buffer_size_etc(id, PortFlags::INTERRUPTABLE, 0)
}

/// Length of the next readable message, with caller flags and timeout
pub fn buffer_size_etc(id: PortId, flags: PortFlags, timeout_us: u64) -> PortResult<usize> {
    port::buffer_size_etc(id, flags | PortFlags::INTERRUPTABLE, timeout_us)
}

/// Number of messages currently queued
pub fn count(id: PortId) -> PortResult<i32> {
    port::count(id)
}

/// Read the next message into a user buffer
pub fn read(id: PortId, ucode: UserPtr, ubuffer: UserPtr, size: usize) -> PortResult<usize> {
    read_etc(id, ucode, ubuffer, size, PortFlags::empty(), 0)
}

/// Read the next message into a user buffer, with flags and timeout
///
/// The message code is stored through `ucode`; the byte count copied is
/// returned.
pub fn read_etc(
    id: PortId,
    ucode: UserPtr,
    ubuffer: UserPtr,
    size: usize,
    flags: PortFlags,
    timeout_us: u64,
) -> PortResult<usize> {
    if ucode.is_null() || ubuffer.is_null() {
        return Err(PortError::InvalidArgs);
    }
    if is_kernel_address(ucode.addr()) || is_kernel_address(ubuffer.addr()) {
        return Err(PortError::BadUserMemory);
    }

    let (code, copied) = port::read_etc(
        id,
        SinkBuffer::User(ubuffer, size),
        flags | PortFlags::USE_USER_MEMCPY | PortFlags::INTERRUPTABLE,
        timeout_us,
    )?;

    unsafe { usercopy::write_user(ucode, code) }.map_err(|_| PortError::BadUserMemory)?;
    Ok(copied)
}

/// Write a message from a user buffer
pub fn write(id: PortId, code: i32, ubuffer: UserPtr, size: usize) -> PortResult<()> {
    write_etc(id, code, ubuffer, size, PortFlags::empty(), 0)
}

/// Write a message from a user buffer, with flags and timeout
pub fn write_etc(
    id: PortId,
    code: i32,
    ubuffer: UserPtr,
    size: usize,
    flags: PortFlags,
    timeout_us: u64,
) -> PortResult<()> {
    if ubuffer.is_null() {
        return Err(PortError::InvalidArgs);
    }
    if is_kernel_address(ubuffer.addr()) {
        return Err(PortError::BadUserMemory);
    }

    port::write_etc(
        id,
        code,
        SourceBuffer::User(ubuffer, size),
        flags | PortFlags::USE_USER_MEMCPY | PortFlags::INTERRUPTABLE,
        timeout_us,
    )
}

/// Reassign a port to another owner task
pub fn set_owner(id: PortId, owner: TaskId) -> PortResult<()> {
    port::set_owner(id, owner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KERNEL_BASE;
    use crate::port::PortInfo;

    fn setup() {
        port::init();
    }

    fn uptr<T>(p: *const T) -> UserPtr {
        UserPtr::new(p as usize)
    }

    fn uptr_mut<T>(p: *mut T) -> UserPtr {
        UserPtr::new(p as usize)
    }

    #[test]
    fn create_and_find_through_user_names() {
        setup();
        let name = b"user shim port\0";
        let id = create(4, uptr(name.as_ptr())).unwrap();

        assert_eq!(find(uptr(name.as_ptr())).unwrap(), id);
        delete(id).unwrap();
    }

    #[test]
    fn null_name_creates_unnamed_port() {
        setup();
        let id = create(1, UserPtr::new(0)).unwrap();
        assert_eq!(port::get_info(id).unwrap().name_str(), "unnamed port");
        delete(id).unwrap();
    }

    #[test]
    fn kernel_pointers_are_rejected() {
        setup();
        let kptr = UserPtr::new(KERNEL_BASE + 0x1000);

        assert_eq!(create(1, kptr).map(|_| ()), Err(PortError::BadUserMemory));
        assert_eq!(find(kptr).map(|_| ()), Err(PortError::BadUserMemory));
        assert_eq!(get_info(1, kptr), Err(PortError::BadUserMemory));

        let id = port::create(1, Some("kernel ptr probe")).unwrap();
        let mut code = 0i32;
        assert_eq!(
            read_etc(id, uptr_mut(&mut code), kptr, 4, PortFlags::TIMEOUT, 0),
            Err(PortError::BadUserMemory)
        );
        assert_eq!(
            write_etc(id, 1, kptr, 4, PortFlags::TIMEOUT, 0),
            Err(PortError::BadUserMemory)
        );
        port::delete(id).unwrap();
    }

    #[test]
    fn null_buffers_are_invalid_args() {
        setup();
        let id = port::create(1, Some("null buffer probe")).unwrap();
        let mut code = 0i32;

        assert_eq!(
            read_etc(id, uptr_mut(&mut code), UserPtr::new(0), 4, PortFlags::TIMEOUT, 0),
            Err(PortError::InvalidArgs)
        );
        assert_eq!(
            write_etc(id, 1, UserPtr::new(0), 4, PortFlags::TIMEOUT, 0),
            Err(PortError::InvalidArgs)
        );
        assert_eq!(find(UserPtr::new(0)).map(|_| ()), Err(PortError::InvalidArgs));

        port::delete(id).unwrap();
    }

    #[test]
    fn round_trip_through_user_buffers() {
        setup();
        let id = port::create(2, Some("user round trip")).unwrap();

        let payload = b"abcd";
        write(id, 0x77, uptr(payload.as_ptr()), payload.len()).unwrap();

        let mut code = 0i32;
        let mut buf = [0u8; 8];
        let n = read(
            id,
            uptr_mut(&mut code),
            uptr_mut(buf.as_mut_ptr()),
            buf.len(),
        )
        .unwrap();

        assert_eq!(code, 0x77);
        assert_eq!(n, 4);
        assert_eq!(&buf[..4], b"abcd");

        delete(id).unwrap();
    }

    #[test]
    fn info_copies_out_to_user_memory() {
        setup();
        let id = port::create(3, Some("user info")).unwrap();

        let mut info = core::mem::MaybeUninit::<PortInfo>::uninit();
        get_info(id, uptr_mut(info.as_mut_ptr())).unwrap();
        let info = unsafe { info.assume_init() };

        assert_eq!(info.id, id);
        assert_eq!(info.capacity, 3);
        assert_eq!(info.name_str(), "user info");

        delete(id).unwrap();
    }

    #[test]
    fn next_info_iterates_with_user_cookie() {
        setup();
        let owner = 77_003;
        let a = port::create(1, Some("user iter a")).unwrap();
        let b = port::create(1, Some("user iter b")).unwrap();
        port::set_owner(a, owner).unwrap();
        port::set_owner(b, owner).unwrap();

        let mut cookie: u32 = 0;
        let mut found = 0;
        loop {
            let mut info = core::mem::MaybeUninit::<PortInfo>::uninit();
            match get_next_info(owner, uptr_mut(&mut cookie), uptr_mut(info.as_mut_ptr())) {
                Ok(()) => found += 1,
                Err(_) => break,
            }
        }
        assert_eq!(found, 2);

        port::delete(a).unwrap();
        port::delete(b).unwrap();
    }
}
