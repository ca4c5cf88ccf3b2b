// Process presence checks backed by sysinfo

use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, System};

/// What the process table says about a PID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Process exists and has not exited
    Alive,
    /// Process has exited but its parent has not reaped it yet
    Zombie,
    /// No such process
    Gone,
}

/// Look up a single process in the system process table
pub fn probe(pid: i32) -> Presence {
    let Ok(raw) = u32::try_from(pid) else {
        return Presence::Gone;
    };
    let sys_pid = Pid::from_u32(raw);

    let mut system = System::new();
    system.refresh_processes_specifics(
        sysinfo::ProcessesToUpdate::Some(&[sys_pid]),
        true,
        ProcessRefreshKind::new(),
    );

    match system.process(sys_pid) {
        Some(process) if process.status() == ProcessStatus::Zombie => Presence::Zombie,
        Some(_) => Presence::Alive,
        None => Presence::Gone,
    }
}
