mod atomicity_test;
mod consistency_test;
mod scd1_test;
mod scd2_test;
