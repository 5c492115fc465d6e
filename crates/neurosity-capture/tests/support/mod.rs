#![allow(dead_code)]

pub mod mock_cloud;
pub mod mock_gateway;
