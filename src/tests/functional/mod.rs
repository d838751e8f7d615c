// Licensed under the Apache-2.0 license

pub mod i2c_test;
