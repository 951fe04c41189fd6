pub mod notification_poller;
