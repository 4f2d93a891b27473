fn main() {
    blockdedup::cli::run();
}
