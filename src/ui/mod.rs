/// Display wall user interface
///
/// - `wall.rs` - the iced application: feed subscription, swap timer, config refresh
/// - `frame.rs` - one framed grid cell with its caption overlay
pub mod frame;
pub mod wall;
