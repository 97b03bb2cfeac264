
#[cfg(test)]
mod client_tests;
#[cfg(test)]
mod notification_api_tests;
#[cfg(test)]
mod realtime_tests;
