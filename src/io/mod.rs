mod range_reader;
mod s3_reader;

pub use range_reader::{read_u32_le, read_u64_le, RangeReader};
pub use s3_reader::{create_s3_client, S3RangeReader};
