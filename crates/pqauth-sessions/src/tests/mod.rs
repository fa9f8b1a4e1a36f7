mod channel;
mod helpers;
mod maintenance;
