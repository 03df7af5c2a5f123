/// Debugger command registry
/// Subsystems register named commands at init; the kernel debugger shell
/// looks them up by name and invokes them with the remaining arguments.
use crate::config::MAX_DBG_COMMANDS;
use crate::{kprintln, log_warn};
use spin::Mutex;

/// A debugger command handler; receives the full argument vector with the
/// command name at index 0
pub type DbgCommand = fn(args: &[&str]);

#[derive(Clone, Copy)]
struct DbgEntry {
    name: &'static str,
    help: &'static str,
    func: DbgCommand,
}

/// Registered commands; a fixed table so registration never allocates
static COMMANDS: Mutex<[Option<DbgEntry>; MAX_DBG_COMMANDS]> =
    Mutex::new([None; MAX_DBG_COMMANDS]);

/// Register a debugger command
///
/// Re-registering an existing name replaces its handler. Returns false if
/// the command table is full.
pub fn add_command(name: &'static str, help: &'static str, func: DbgCommand) -> bool {
    let mut table = COMMANDS.lock();

    // Replace an existing entry with the same name
    for slot in table.iter_mut() {
        if let Some(entry) = slot {
            if entry.name == name {
                entry.func = func;
                entry.help = help;
                return true;
            }
        }
    }

    for slot in table.iter_mut() {
        if slot.is_none() {
            *slot = Some(DbgEntry { name, help, func });
            return true;
        }
    }

    log_warn!("dbg", "command table full, dropping '{}'", name);
    false
}

/// Invoke a registered command by name
///
/// `args[0]` must be the command name. Returns false if no such command
/// is registered.
pub fn invoke(args: &[&str]) -> bool {
    let name = match args.first() {
        Some(&n) => n,
        None => return false,
    };

    let func = {
        let table = COMMANDS.lock();
        table
            .iter()
            .flatten()
            .find(|e| e.name == name)
            .map(|e| e.func)
    };

    // Run the handler outside the table lock; handlers may print at length
    // or register further commands.
    match func {
        Some(f) => {
            f(args);
            true
        }
        None => false,
    }
}

/// Print the list of registered commands and their help strings
pub fn dump_commands() {
    let table = COMMANDS.lock();
    for entry in table.iter().flatten() {
        crate::kprintln!("{:<16} {}", entry.name, entry.help);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    static HITS: AtomicUsize = AtomicUsize::new(0);

    fn test_cmd(_args: &[&str]) {
        HITS.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn register_and_invoke() {
        assert!(add_command("selftest", "registry self test", test_cmd));
        assert!(invoke(&["selftest"]));
        assert!(HITS.load(Ordering::Relaxed) >= 1);
        assert!(!invoke(&["no-such-command"]));
    }

    #[test]
    fn reregister_replaces() {
        assert!(add_command("replaced", "first", test_cmd));
        assert!(add_command("replaced", "second", test_cmd));
        let before = HITS.load(Ordering::Relaxed);
        assert!(invoke(&["replaced"]));
        assert_eq!(HITS.load(Ordering::Relaxed), before + 1);
    }
}
