/// Vulkan Debug Messenger - validation layer messages with colored output
///
/// Messages are filtered by the configured `DebugSeverity`, counted per
/// severity and grouped so repeated messages show an occurrence count.

use ash::vk;
use colored::*;
use ember_3d_engine::ember3d::DebugSeverity;
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

/// Severity filter of the active messenger (None = messages ignored)
static DEBUG_SEVERITY: Mutex<Option<DebugSeverity>> = Mutex::new(None);

static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Identical messages grouped by text
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Validation message counts since the messenger was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

struct ValidationStatsTracker {
    active: AtomicBool,
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn record(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) {
        let counter = if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            &self.errors
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            &self.warnings
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            &self.info
        } else {
            &self.verbose
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get_stats(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

/// Initialize the callback filter and reset statistics
pub fn init_debug_config(severity: DebugSeverity) {
    VALIDATION_STATS.reset();
    VALIDATION_STATS.active.store(true, Ordering::Relaxed);

    if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
        *tracker = Some(FxHashMap::default());
    }
    if let Ok(mut config) = DEBUG_SEVERITY.lock() {
        *config = Some(severity);
    }
}

/// Disable the callback (called before the messenger is destroyed)
pub fn cleanup_debug_config() {
    VALIDATION_STATS.active.store(false, Ordering::Relaxed);
    if let Ok(mut config) = DEBUG_SEVERITY.lock() {
        *config = None;
    }
}

/// Get current validation statistics
pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_STATS.get_stats()
}

/// Print validation statistics report
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "✓ No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());

    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }

    println!("  {} {}", "Total:".white().bold(), stats.total());

    if let Ok(tracker) = MESSAGE_TRACKER.lock() {
        let duplicates = tracker
            .as_ref()
            .map(|messages| messages.values().filter(|&&count| count > 1).count())
            .unwrap_or(0);
        if duplicates > 0 {
            println!("\n  {} {} message(s) appeared multiple times", "ℹ".cyan(), duplicates);
        }
    }

    println!("{}\n", "====================================".bright_blue().bold());
}

fn severity_passes(filter: DebugSeverity, severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> bool {
    match filter {
        DebugSeverity::ErrorsOnly => severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR),
        DebugSeverity::ErrorsAndWarnings => {
            severity.intersects(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
            )
        }
        DebugSeverity::All => true,
    }
}

fn track_message(message: &str) -> u32 {
    let Ok(mut tracker) = MESSAGE_TRACKER.lock() else {
        return 1;
    };
    let count = tracker
        .get_or_insert_with(FxHashMap::default)
        .entry(message.to_string())
        .or_insert(0);
    *count += 1;
    *count
}

/// Vulkan debug messenger callback
///
/// # Safety
///
/// Called by the Vulkan loader with valid callback data.
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || !VALIDATION_STATS.active.load(Ordering::Relaxed) {
        return vk::FALSE;
    }

    let filter = match DEBUG_SEVERITY.lock() {
        Ok(guard) => match *guard {
            Some(filter) => filter,
            None => return vk::FALSE,
        },
        Err(_) => return vk::FALSE,
    };
    if !severity_passes(filter, message_severity) {
        return vk::FALSE;
    }

    let callback_data = *p_callback_data;
    let message_id_name = if callback_data.p_message_id_name.is_null() {
        "Unknown"
    } else {
        CStr::from_ptr(callback_data.p_message_id_name)
            .to_str()
            .unwrap_or("Invalid UTF-8")
    };
    let message = if callback_data.p_message.is_null() {
        "No message"
    } else {
        CStr::from_ptr(callback_data.p_message)
            .to_str()
            .unwrap_or("Invalid UTF-8")
    };

    VALIDATION_STATS.record(message_severity);

    let severity_colored = if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        "ERROR".red().bold()
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        "WARNING".yellow().bold()
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        "INFO".cyan()
    } else {
        "VERBOSE".bright_black()
    };

    let type_str = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    };

    let occurrences = track_message(message);
    let repeat_indicator = if occurrences > 1 {
        format!(" [×{}]", occurrences)
    } else {
        String::new()
    };

    eprint!(
        "{} {} [{}]{}\n  ├─ {}: {}\n  └─ {}\n",
        "[VULKAN".bright_blue().bold(),
        format!("{}]", severity_colored).bright_blue().bold(),
        type_str.bright_black(),
        repeat_indicator.yellow(),
        "Message ID".bright_black(),
        message_id_name.white(),
        message.white()
    );

    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
