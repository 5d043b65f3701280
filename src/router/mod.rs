pub mod webhook_router;
