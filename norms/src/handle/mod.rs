pub mod common_cpu;
