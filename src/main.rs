fn main() {
    pollster::block_on(glint::run());
}
