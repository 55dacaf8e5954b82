mod tcpstream;
mod vec;
