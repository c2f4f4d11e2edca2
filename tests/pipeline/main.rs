mod chain;
mod design;
mod retries;
