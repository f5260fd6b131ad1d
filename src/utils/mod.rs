pub mod api_response;
pub mod notification;
pub mod spreadsheet;
