mod analytics_routes;
mod auth_routes;
mod goal_routes;
mod image_routes;
mod strategy_routes;
mod trade_routes;
mod user_routes;

pub use analytics_routes::analytics_routes;
pub use auth_routes::auth_routes;
pub use goal_routes::goal_routes;
pub use image_routes::image_routes;
pub use strategy_routes::strategy_routes;
pub use trade_routes::trade_routes;
pub use user_routes::user_routes;
