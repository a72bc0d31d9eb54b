pub mod loop_;
pub mod processor;
pub mod prompt;

pub use loop_::run;
pub use processor::MessageProcessor;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_reexport_exists<F>(_value: F) {}

    #[test]
    fn run_function_is_reexported() {
        assert_reexport_exists(run);
        assert_reexport_exists(loop_::run);
    }
}
