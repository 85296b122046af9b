use minelogic::*;
use std::thread;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // --- 1. Initialization ---
    let mut game = Game::new(10, 10, 15);
    let mut solver = Solver::new(game.width, game.height);
    let mut rng = rand::rng();

    println!("--- Autonomous Minesweeper Bot ---");
    println!("Strategy: Prioritize provably safe moves, guess randomly otherwise.");
    println!("Initial Board:");
    print_board(&game);
    thread::sleep(Duration::from_secs(2));

    // --- 2. Game Loop ---
    let mut move_count = 0;
    while game.game_state == GameState::Playing {
        move_count += 1;
        println!("\n--- Move #{} ---", move_count);

        // --- 3. Bot's Decision Logic ---

        // Strategy 1: a cell the knowledge base proves safe.
        let point = match solver.next_certain_safe_move() {
            Some(point) => {
                println!("Logic found a guaranteed safe cell.");
                point
            }
            // Strategy 2: no certain move exists, so guess among the cells
            // that are neither played nor proven mines.
            None => match solver.random_move(&mut rng) {
                Some(point) => {
                    println!("No provably safe move. Making a random guess...");
                    point
                }
                None => {
                    println!("No valid moves left for the bot to make.");
                    break;
                }
            },
        };

        // --- 4. Execute the Chosen Move ---
        println!("Bot reveals ({}, {})...", point.x, point.y);

        match game.reveal_cell(point)? {
            Some(count) => solver.observe(point, count)?,
            None => println!("That was a mine."),
        }

        // Flag every cell the solver has proven to be a mine.
        for &mine in solver.certain_mines() {
            game.flag_cell(mine);
        }

        print_board(&game);

        // Add a delay to make the game watchable
        thread::sleep(Duration::from_millis(500));
    }

    // --- 5. Final Result ---
    println!("\n--- Game Over ---");

    match game.game_state {
        GameState::Won => println!("Result: The bot won!"),
        GameState::Lost => println!("Result: The bot hit a mine and lost."),
        GameState::Playing => println!("Result: The game ended unexpectedly."),
    }

    Ok(())
}

fn print_board(game: &Game) {
    // Print header
    print!("   ");
    for x in 0..game.width {
        print!("{:^3}", x);
    }
    println!("\n  +{}", "---".repeat(game.width));

    // Print rows
    for y in 0..game.height {
        print!("{:^2}|", y);
        for x in 0..game.width {
            let at = Point { x, y };
            let display = match game.board[y][x] {
                // Once the game is lost, show where the mines actually were.
                Cell::Hidden if game.game_state == GameState::Lost && game.is_mine(at) => {
                    " * ".to_string()
                }
                Cell::Hidden => " ■ ".to_string(),
                Cell::Flagged => " F ".to_string(),
                Cell::Revealed(n) => format!(" {} ", n),
            };
            print!("{}", display);
        }
        println!();
    }
    println!();
}
