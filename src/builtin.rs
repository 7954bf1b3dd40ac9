pub const BOARD_CSS: &str = include_str!("board.css");
