#[cfg(test)]
pub mod client_flow_tests;
#[cfg(test)]
pub mod rpc_provider_tests;
