pub mod api_list;
pub mod writer;
