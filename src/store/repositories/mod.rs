mod metrics;
mod sessions;
