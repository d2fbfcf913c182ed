use squawk::error::AppResult;

fn main() -> AppResult<()> {
    squawk::entry::run()
}
