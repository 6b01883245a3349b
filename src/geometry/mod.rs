// Display sizing that preserves the camera's aspect ratio.

pub mod view;
