// uDashBoard: featherweight dashboard application.
//
// Copyright (C) 2019  Brandon Lewis
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

use std::env::args;
use std::fs;
use std::io::{stdin, stdout};
use std::process::exit;

use bytecode_vm::vm::Vm;

fn main() {
    let path = match args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: bcvm <bytecode-file>");
            exit(2);
        }
    };

    let code = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("couldn't read {}: {}", path, err);
            exit(1);
        }
    };

    let mut vm = Vm::new();
    let mut out = stdout();
    let mut input = std::io::BufReader::new(stdin());
    if let Err(err) = vm.run(&code, &mut out, &mut input) {
        eprintln!("{:?}", err);
        exit(70);
    }
}
