/// Gate.io v4 spot WebSocket & REST message shapes.
pub mod gate;
