//! awstags — find EC2 instances and volumes by tag across regions.

pub mod aws_config;
pub mod cache;
pub mod cli;
pub mod ec2;
pub mod search;
