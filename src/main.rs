fn main() {
    stopwatch_lib::run()
}
