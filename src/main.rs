fn main() {
    slippi_scoreboard_sync::run();
}
