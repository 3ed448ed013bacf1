//! Verdict classification
//!
//! Pure mapping from compile/run exit statuses and output comparison to a `Verdict`.
//! Exit statuses follow the shell conventions of the run wrapper: `timeout
//! --preserve-status` reports 128 + SIGTERM when it stops the program, and the kernel
//! OOM killer inside the sandbox surfaces as 128 + SIGKILL.

use super::verdict::Verdict;

/// Program exited normally
pub const EXIT_SUCCESS: i32 = 0;
/// Program failed on its own
pub const EXIT_RUNTIME_ERROR: i32 = 1;
/// SIGKILL from the memory ceiling
pub const EXIT_MEMORY_KILLED: i32 = 137;
/// SIGTERM from the timeout wrapper
pub const EXIT_TIMED_OUT: i32 = 143;

/// Verdict for a run that did not exit with status 0
pub fn classify_failure(exit_code: i32) -> Verdict {
    match exit_code {
        EXIT_RUNTIME_ERROR => Verdict::RuntimeError,
        EXIT_TIMED_OUT => Verdict::TimeLimitExceeded,
        EXIT_MEMORY_KILLED => Verdict::MemoryLimitExceeded,
        _ => Verdict::Unknown,
    }
}

/// Verdict for a graded run, comparing produced output against the expected answer
pub fn classify_graded(exit_code: i32, produced: &str, expected: &str) -> Verdict {
    if exit_code != EXIT_SUCCESS {
        return classify_failure(exit_code);
    }

    if outputs_match(produced, expected) {
        Verdict::Accepted
    } else {
        Verdict::WrongAnswer
    }
}

/// Verdict for a custom run; there is nothing to compare against
pub fn classify_custom(exit_code: i32) -> Verdict {
    if exit_code == EXIT_SUCCESS {
        Verdict::Accepted
    } else {
        classify_failure(exit_code)
    }
}

/// Verdict for a compile step, `None` when the run phase should proceed
pub fn classify_compile(exit_code: i32) -> Option<Verdict> {
    (exit_code != EXIT_SUCCESS).then_some(Verdict::CompileError)
}

/// Compare outputs after trimming surrounding whitespace
pub fn outputs_match(produced: &str, expected: &str) -> bool {
    produced.trim() == expected.trim()
}
