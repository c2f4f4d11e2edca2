mod summary;
mod verify;
