//! Scheduling priority of encoder child processes.
//!
//! Only the child's pid is touched; the normalizer's own priority is never
//! changed, so workers do not share any process-wide state here.

use std::io;

/// Niceness applied to encoder children (lowest priority)
pub const CHILD_NICENESS: i32 = 19;

/// Lower CPU and I/O priority of process `pid`. Best-effort: callers log the error and carry on.
///
/// Both adjustments are attempted; the first failure is returned.
#[cfg(unix)]
pub fn lower_process_priority(pid: u32) -> io::Result<()> {
    let cpu = lower_cpu_priority(pid);
    let io = lower_io_priority(pid);
    cpu.and(io)
}

#[cfg(unix)]
fn lower_cpu_priority(pid: u32) -> io::Result<()> {
    // SAFETY: setpriority only reads its integer arguments
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, pid as libc::id_t, CHILD_NICENESS) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn lower_process_priority(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "priority adjustment is not supported on this platform"))
}

#[cfg(target_os = "linux")]
fn lower_io_priority(pid: u32) -> io::Result<()> {
    const IOPRIO_WHO_PROCESS: libc::c_int = 1;
    const IOPRIO_CLASS_IDLE: libc::c_int = 3;
    const IOPRIO_CLASS_SHIFT: libc::c_int = 13;

    let ioprio = IOPRIO_CLASS_IDLE << IOPRIO_CLASS_SHIFT;
    // SAFETY: ioprio_set takes three integers and has no memory arguments
    let rc = unsafe { libc::syscall(libc::SYS_ioprio_set, IOPRIO_WHO_PROCESS, pid as libc::c_int, ioprio) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(all(unix, not(target_os = "linux")))]
fn lower_io_priority(_pid: u32) -> io::Result<()> {
    Ok(())
}
