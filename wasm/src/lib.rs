use minelogic as ml;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn create_game(size: u8, mines: u8) -> Vec<u8> {
    console_error_panic_hook::set_once();

    let game = ml::Game::new(size as usize, size as usize, mines as usize);
    let bts = game.serialize();
    bts
}

#[wasm_bindgen]
pub fn validate(bts: Vec<u8>) -> bool {
    console_error_panic_hook::set_once();

    let game = ml::Game::deserialize(&bts);
    game.check_win_condition()
}

#[wasm_bindgen]
pub fn choose_cell(bts: Vec<u8>, x: usize, y: usize) -> Result<Vec<u8>, String> {
    console_error_panic_hook::set_once();

    let mut game = ml::Game::deserialize(&bts);
    let point = ml::Point { x, y };
    let res = game.reveal_cell(point).map_err(|e| e.to_string())?;
    let mut xs = game.serialize();
    xs.push(if res.is_some() { 0 } else { 1 });
    Ok(xs)
}

#[wasm_bindgen]
pub fn flag_cell(bts: Vec<u8>, x: usize, y: usize) -> Vec<u8> {
    console_error_panic_hook::set_once();

    let mut game = ml::Game::deserialize(&bts);
    game.flag_cell(ml::Point { x, y });
    game.serialize()
}

#[wasm_bindgen]
pub fn get_cells(bts: Vec<u8>) -> Vec<i8> {
    console_error_panic_hook::set_once();

    let game = ml::Game::deserialize(&bts);
    game.board
        .into_iter()
        .map(|row| {
            row.into_iter().map(|cell| match cell {
                ml::Cell::Hidden => -1,
                ml::Cell::Flagged => -2,
                ml::Cell::Revealed(n) => n as i8,
            })
        })
        .flatten()
        .collect()
}

/// Per-cell verdicts from the deduction engine, rebuilt from the visible
/// board: 1 = certain mine, 0 = certain safe and still unplayed, -1 =
/// undetermined.
#[wasm_bindgen]
pub fn hints(bts: Vec<u8>) -> Result<Vec<i8>, String> {
    console_error_panic_hook::set_once();

    let game = ml::Game::deserialize(&bts);
    let solver = ml::Solver::replay(&game).map_err(|e| e.to_string())?;
    let mines = solver.certain_mines();
    let safes = solver.certain_safe_unplayed();

    let mut verdicts = Vec::with_capacity(game.width * game.height);
    for y in 0..game.height {
        for x in 0..game.width {
            let point = ml::Point { x, y };
            verdicts.push(if mines.contains(&point) {
                1
            } else if safes.contains(&point) {
                0
            } else {
                -1
            });
        }
    }
    Ok(verdicts)
}
