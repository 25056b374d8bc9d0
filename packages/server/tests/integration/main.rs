
mod http;
mod postgres;
