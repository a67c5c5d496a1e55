fn main() {
    holdem_solver::cli::run();
}
